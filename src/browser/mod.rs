//! Browser Session Kernel and its supporting pieces: process setup, profile
//! directory management, Cloudflare handling, and the kernel itself.

pub mod cloudflare;
pub mod errors;
pub mod kernel;
pub mod profile;
pub mod setup;

pub use cloudflare::{detect_challenge, solve_challenge, ChallengeKind};
pub use errors::KernelError;
pub use kernel::{BrowserKernel, NavigateResult, TabInfo};
pub use profile::{create_unique_profile, create_unique_profile_with_prefix, BrowserProfile};
pub use setup::{apply_stealth_measures, find_browser_executable, launch_browser};
