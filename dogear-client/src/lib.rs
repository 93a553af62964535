mod store;
pub use store::{Comment, CommentPatch, CommentStore};

mod gate;
pub use gate::should_obscure;

mod pagination;
pub use pagination::{PageFetch, Pagination, DEFAULT_PAGE_SIZE};

mod coordinator;
pub use coordinator::{DeleteTicket, MutationCoordinator, PostResolution, PostTicket};

mod view;
pub use view::{thread, ThreadItem};

mod discussion;
pub use discussion::{Discussion, MutationOutcome, Viewer};

mod http;
pub use crate::http::HttpServer;

pub mod api {
    pub use dogear_api::*;
}
