pub mod analysis;
pub mod local;
pub mod modification;
pub mod notification;
pub mod report;

pub use analysis::{AnalysisService, HttpAnalysisService, RunRequest};
pub use local::{LocalAnalysisService, LocalModificationService, LocalReportService};
pub use modification::{BuildRequest, HttpModificationService, ModificationService};
pub use notification::{ChannelNotificationBus, NotificationBus, StudyEvent};
pub use report::{HttpReportService, ReportService};
