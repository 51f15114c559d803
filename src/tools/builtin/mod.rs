//! Built-in tools every team gets for free: `final_answer` to close out a
//! loop, `handoff` to pass work to another role, and `echo` as a minimal
//! example/test fixture.

pub mod echo;
pub mod final_answer;
pub mod handoff;
