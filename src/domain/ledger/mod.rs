pub mod model;
pub mod service;

// 公開APIの再エクスポート
pub use model::{retain_unseen, SeenArticle};
pub use service::ArticleLedger;
