//! Site-building tools layered on the `tagloop` file tools.
//!
//! The [`catalog`] is what a site session offers the model: every `fs.*`
//! tool, the todo list, the component and page registries, and wireframe
//! templating. The session config's allow-list narrows it further.

pub mod component;
pub mod page;
pub mod todo;

pub use component::{ListComponents, RegisterComponent};
pub use page::{ListPages, RegisterPage};
pub use todo::{AddTodo, CompleteTodo, ListTodos, RemoveTodo};

use crate::wireframe::LayoutWireframe;
use tagloop::tools::{Tool, filesystem_tools};

// ── Tool name constants ─────────────────────────────────────────────

pub const TODO_ADD: &str = "todo.add";
pub const TODO_LIST: &str = "todo.list";
pub const TODO_COMPLETE: &str = "todo.complete";
pub const TODO_REMOVE: &str = "todo.remove";
pub const COMPONENT_REGISTER: &str = "component.register";
pub const COMPONENT_LIST: &str = "component.list";
pub const PAGE_REGISTER: &str = "page.register";
pub const PAGE_LIST: &str = "page.list";
pub const LAYOUT_WIREFRAME: &str = "layout.wireframe";

/// Every site tool, uninitialized, in catalog order.
pub fn catalog() -> Vec<Box<dyn Tool>> {
    let mut tools = filesystem_tools();
    tools.push(Box::new(AddTodo::default()));
    tools.push(Box::new(ListTodos::default()));
    tools.push(Box::new(CompleteTodo::default()));
    tools.push(Box::new(RemoveTodo::default()));
    tools.push(Box::new(RegisterComponent::default()));
    tools.push(Box::new(ListComponents::default()));
    tools.push(Box::new(RegisterPage::default()));
    tools.push(Box::new(ListPages::default()));
    tools.push(Box::new(LayoutWireframe::default()));
    tools
}
