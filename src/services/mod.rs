pub mod operator_service;
pub mod task_service;

pub use operator_service::OperatorService;
pub use task_service::{TaskDetails, TaskListFilter, TaskListPage, TaskService, UpdateStatusRequest};
