/*!
 * Interactive commands
 */

pub mod init;

pub use init::{bootstrap_document, server_target_from_url, InteractiveSetup, ServerTarget};
