pub mod dispatcher;
pub mod pager;
pub mod query_client;
pub mod refresher;
pub mod search;

pub use dispatcher::{MutationDispatcher, RollbackPolicy, SelectionSet};
pub use pager::{CATEGORIES_PER_PAGE, PageWindow, Pager, TODOS_PER_PAGE};
pub use query_client::{FetchHandle, QueryClient};
pub use refresher::RefreshWorker;
pub use search::{SEARCH_DEBOUNCE, SearchDebouncer, filter_todos_local};
