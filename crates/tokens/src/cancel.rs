use tokio_util::sync::CancellationToken;

use crate::error::{Result, RetokenizeError};

/// Fails with [`RetokenizeError::Cancelled`] once `cancel` has fired.
#[inline]
pub(crate) fn checkpoint(cancel: &CancellationToken) -> Result<()> {
	if cancel.is_cancelled() {
		return Err(RetokenizeError::Cancelled);
	}
	Ok(())
}
