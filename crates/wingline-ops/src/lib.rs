//! Built-in stage operators: the two closure shapes a user's `process`
//! can take, adapted to the one shape `Stage::process` expects
//! (`spec.md` §4.2), plus `head`/`tail` and `identity`.

pub mod each_all;
pub mod head_tail;
pub mod identity;

pub use each_all::{AllProcess, AllStage, EachAsAll, EachProcess};
pub use head_tail::{Head, Tail};
pub use identity::Identity;
