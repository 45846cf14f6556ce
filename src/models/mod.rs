//! Data model: row types and queries per entity, on the sqlx runtime API.

pub mod generation_event;
pub mod labor_metric;
pub mod operator;
pub mod task;
pub mod task_line;
pub mod task_status_log;
pub mod user;
pub mod zone;

pub use generation_event::{NewTaskGenerationEvent, TaskGenerationEvent};
pub use labor_metric::{LaborDailyMetric, LaborMetricRow};
pub use operator::{Operator, OperatorStatus};
pub use task::{NewTask, PaginationInfo, Task, TaskScope, TaskType};
pub use task_line::{NewTaskLine, TaskLine, TaskLineDetail};
pub use task_status_log::{NewTaskStatusLog, TaskStatusLog};
pub use user::User;
pub use zone::{Zone, ZoneSummary};
