#![forbid(unsafe_code)]

//! Server side of imodal.
//!
//! ```ignore
//! fn edit_user(request: &IncomingRequest) -> Result<PageResponse> {
//!     let page = PageResponse::new("Users/Edit", request.url.path()).with_props(props);
//!     page.modal(request, "/users").render(request, &router)
//! }
//! ```

mod error;
mod request;
mod response;
mod router;

pub use error::{Result, ServerError};
pub use request::{IncomingRequest, Session, UploadedFile, UserResolver};
pub use response::{MODAL_SHARED_PROP, ModalPayload, ModalResponse, ModalResponseExt, absolute_url};
pub use router::{RouteDispatcher, Router};
