pub mod compliance_service;
pub mod dashboard_service;
pub mod fridge_service;
pub mod medical_request_service;
pub mod notification_service;
pub mod practice_service;
pub mod task_service;

pub use compliance_service::{ComplianceScores, ComplianceService};
pub use dashboard_service::DashboardService;
pub use fridge_service::FridgeService;
pub use medical_request_service::MedicalRequestService;
pub use notification_service::{NewNotification, NotificationService};
pub use practice_service::{PracticeError, PracticeService};
