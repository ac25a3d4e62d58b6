use std::path::PathBuf;
use std::sync::Arc;

use aristocratii_db::Database;
use aristocratii_gateway::{ChatGateway, Dispatcher};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub gateway: ChatGateway,
    /// Directory uploaded images are written to
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    pub fn new(db: Database, upload_dir: PathBuf, max_upload_bytes: usize) -> AppState {
        let db = Arc::new(db);
        let gateway = ChatGateway::new(db.clone(), Dispatcher::new());
        Arc::new(Self {
            db,
            gateway,
            upload_dir,
            max_upload_bytes,
        })
    }
}
