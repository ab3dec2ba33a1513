pub mod category;
pub mod collaborator;
pub mod subtodo;
pub mod todo;

pub use category::{CategoriesPage, Category, CategoryCreate, CategorySort, CategoryUpdate, Priority};
pub use collaborator::{CollaborationStatus, Collaborator, CollaboratorsPage, InviteDecision};
pub use subtodo::{SubTodo, SubTodoCreate, SubTodoUpdate, SubTodosPage};
pub use todo::{Todo, TodoCreate, TodoStatus, TodoUpdate, TodosPage};
