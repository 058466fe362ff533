pub mod auth_service;
pub mod contact_service;
pub mod delivery_service;
pub mod health_service;
pub mod message_service;

pub use auth_service::AuthService;
pub use contact_service::ContactService;
pub use delivery_service::DeliveryService;
pub use health_service::HealthService;
pub use message_service::MessageService;
