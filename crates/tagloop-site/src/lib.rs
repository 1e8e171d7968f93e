//! Static web-site building agent on top of `tagloop`.
//!
//! Adds site-specific tools to the framework's file tools and wires them
//! into a session:
//!
//! - [`tools`]: the todo list, component and page registries, and the
//!   [`catalog`](tools::catalog) a site session offers the model.
//! - [`wireframe`]: section-list templating into `index.html` + `style.css`,
//!   as a library function and the `layout.wireframe` tool.
//! - [`bridge`]: the chat pump used by interactive front-ends.
//! - [`config`]: [`SiteConfig`] and `.tagloop/` scaffolding.
//! - [`store`]: forgiving load and atomic save for the JSON registries.
//!
//! ```ignore
//! let mut agent = SiteConfig::new("site").build_agent()?;
//! let reply = bridge::chat(&mut agent, "Add a contact page", &ChatOptions::default()).await?;
//! println!("{}", reply.reply);
//! ```

pub mod bridge;
pub mod config;
pub mod prompt;
pub mod store;
pub mod tools;
pub mod wireframe;

pub use bridge::{ChatOptions, ChatReply, chat};
pub use config::{ScaffoldOptions, SiteConfig, scaffold};
