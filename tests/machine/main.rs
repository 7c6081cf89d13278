mod backtracking;
mod bytecode;
mod helper;
mod primitives;
mod proptests;
mod tables;
mod tail_calls;
