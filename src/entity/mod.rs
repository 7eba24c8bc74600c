pub mod categories;
pub mod products;
pub mod user_tasks;
pub mod users;

pub use categories::Entity as Categories;
pub use products::Entity as Products;
pub use user_tasks::Entity as UserTasks;
pub use users::Entity as Users;
