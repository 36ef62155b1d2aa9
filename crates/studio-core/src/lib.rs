//! Studio Core - image operations, identity and admin authentication.
//!
//! This crate holds the logic that does not touch persistence:
//!
//! - [`imaging`]: generative-image API client and the studio operations
//! - [`identity`]: hosted account service with a local-only fallback signal
//! - [`auth`]: admin password hashing and validation, session tokens

pub mod auth;
pub mod identity;
pub mod imaging;

pub use auth::{AuthError, AuthManager, SessionToken, ADMIN_SESSION_TTL, MIN_PASSWORD_LENGTH};
pub use identity::{
    DisabledIdentity, FirebaseIdentity, IdentityError, IdentityErrorCode, IdentityProvider,
    RemoteUser,
};
pub use imaging::{
    EnhanceMode, GeminiClient, GeneratedImage, GenerationRequest, ImageApi, ImageInput,
    ImageOperation, ImageStudio, ImagingConfig, ImagingError,
};
