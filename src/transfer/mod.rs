pub mod downloader;
pub mod receiver;
pub mod uploader;

pub use downloader::Downloader;
pub use receiver::UploadReceiver;
pub use uploader::Uploader;
