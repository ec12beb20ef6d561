pub mod config;
pub mod domain;
pub mod errors;
pub mod invite;
pub mod phone;
pub mod retry;
pub mod services;

pub use domain::command::{CommandCategory, CommandMetadata, CommandParameter};
pub use domain::member::{Player, RegistrationStatus, TeamMember, UserFlowType};
pub use domain::message::{ChatType, ContactPayload, InboundMessage, MessageKind, NewMember};
pub use domain::routing::{ExecutionContext, RoutingResult};
pub use errors::{ApplicationError, RoutingError};
pub use invite::{InviteContext, InviteLinkRejection, ProcessedInvite};
pub use phone::{PhoneFormat, PhoneNormalizer, PhoneRejection, PhoneValidationResult};
pub use retry::RetryPolicy;
pub use services::{
    CommandRegistry, DirectoryError, DirectoryProvider, DirectoryService, ExecutorError,
    InMemoryDirectory, RegistryError, StaticDirectoryProvider, TaskExecutor, TaskOutcome,
};
