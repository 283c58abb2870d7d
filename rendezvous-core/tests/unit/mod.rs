mod crdt_proptest;
mod matching_flow;
mod psi_pipeline;
mod storage;
mod submissions;
