use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejections use the in-band error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
