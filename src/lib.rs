#![warn(clippy::pedantic)]
// Noisy doc/signature lints — would require annotating dozens of pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference — keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Intentional casts in LLM/API integration code (token counts, scores, sizes)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
// Module structure — foo::FooClient pattern by design
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod cli;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod lookup;
pub mod providers;
pub mod session;
pub mod tools;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
