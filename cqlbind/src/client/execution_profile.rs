//! `ExecutionProfile` is a grouping of configurable options regarding statement execution.
//!
//! There are two classes of objects related to execution profiles: `ExecutionProfile` and `ExecutionProfileHandle`.
//! The former is simply an immutable set of the settings. The latter is a handle that at particular moment points
//! to some `ExecutionProfile` (but during its lifetime, it can change the profile it points at).
//! Handles are assigned to prepared and bound statements, which pass them through unchanged
//! and only consult them for the effective page size.
//!
//! ### Example
//! To create an `ExecutionProfile` and attach it to a prepared statement:
//! ```
//! # use cqlbind::client::execution_profile::ExecutionProfile;
//! # use cqlbind::frame::response::result::{Prepared, PreparedMetadata, ResultMetadata};
//! # use cqlbind::statement::prepared::PreparedStatement;
//! # use cqlbind::statement::PageSize;
//! # use std::time::Duration;
//! # fn check_only_compiles() -> Result<(), Box<dyn std::error::Error>> {
//! let profile = ExecutionProfile::builder()
//!     .page_size(PageSize::new(100)?)
//!     .request_timeout(Some(Duration::from_secs(30)))
//!     .build();
//!
//! let handle = profile.into_handle();
//!
//! let prepared = Prepared {
//!     id: bytes::Bytes::from_static(b"id"),
//!     result_metadata_id: None,
//!     prepared_metadata: PreparedMetadata::new(vec![], &[])?,
//!     result_metadata: ResultMetadata::mock_empty(),
//! };
//! let statement = PreparedStatement::builder(prepared, "SELECT * FROM ks.t")
//!     .execution_profile_handle(Some(handle))
//!     .build()?;
//! assert_eq!(statement.bind(())?.effective_page_size().inner(), 100);
//! # Ok(())
//! # }
//! ```
//!
//! `ExecutionProfileHandle`s can be remapped to another `ExecutionProfile`, and the change
//! affects all statements that have been assigned that handle, including statements
//! that were already bound. This enables quick workload switches.

use std::{fmt::Debug, sync::Arc, time::Duration};

use arc_swap::ArcSwap;

use crate::statement::PageSize;

pub(crate) mod defaults {
    use super::ExecutionProfileInner;
    use crate::statement::PageSize;
    use std::time::Duration;

    pub(crate) fn page_size() -> PageSize {
        PageSize::DEFAULT
    }
    pub(crate) fn request_timeout() -> Option<Duration> {
        Some(Duration::from_secs(30))
    }

    impl Default for ExecutionProfileInner {
        fn default() -> Self {
            Self {
                page_size: page_size(),
                request_timeout: request_timeout(),
            }
        }
    }
}

/// `ExecutionProfileBuilder` is used to create new `ExecutionProfile`s
/// # Example
///
/// ```
/// # use cqlbind::client::execution_profile::ExecutionProfile;
/// # use cqlbind::statement::PageSize;
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let profile: ExecutionProfile = ExecutionProfile::builder()
///     .page_size(PageSize::new(1000)?)
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ExecutionProfileBuilder {
    page_size: Option<PageSize>,
    request_timeout: Option<Option<Duration>>,
}

impl ExecutionProfileBuilder {
    /// Changes the page size of paged requests.
    /// The default is 5000 rows.
    pub fn page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Changes client-side timeout.
    /// The default is 30 seconds.
    ///
    /// # Example
    /// ```
    /// # use cqlbind::client::execution_profile::ExecutionProfile;
    /// # use std::time::Duration;
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let profile: ExecutionProfile = ExecutionProfile::builder()
    ///     .request_timeout(Some(Duration::from_secs(5)))
    ///     .build();
    /// # Ok(())
    /// # }
    /// ```
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the ExecutionProfile after setting all the options.
    pub fn build(self) -> ExecutionProfile {
        ExecutionProfile(Arc::new(ExecutionProfileInner {
            page_size: self.page_size.unwrap_or_else(defaults::page_size),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(defaults::request_timeout),
        }))
    }
}

impl Default for ExecutionProfileBuilder {
    fn default() -> Self {
        ExecutionProfile::builder()
    }
}

/// A profile that groups configurable options regarding statement execution.
///
/// Execution profile is immutable as such, but the driver implements double indirection of form:
/// statement -> ExecutionProfileHandle -> ExecutionProfile
/// which enables on-fly changing the actual profile associated with all statements
/// by the same handle.
#[derive(Debug, Clone)]
pub struct ExecutionProfile(pub(crate) Arc<ExecutionProfileInner>);

#[derive(Debug)]
pub(crate) struct ExecutionProfileInner {
    pub(crate) page_size: PageSize,
    pub(crate) request_timeout: Option<Duration>,
}

impl ExecutionProfileInner {
    /// Creates a builder having all options set to the same as set in this ExecutionProfileInner.
    pub(crate) fn to_builder(&self) -> ExecutionProfileBuilder {
        ExecutionProfileBuilder {
            page_size: Some(self.page_size),
            request_timeout: Some(self.request_timeout),
        }
    }
}

impl Default for ExecutionProfile {
    fn default() -> Self {
        Self(Arc::new(ExecutionProfileInner::default()))
    }
}

impl ExecutionProfile {
    /// Creates a blank builder that can be used to construct new ExecutionProfile.
    pub fn builder() -> ExecutionProfileBuilder {
        ExecutionProfileBuilder {
            page_size: None,
            request_timeout: None,
        }
    }

    /// Creates a builder having all options set to the same as set in this ExecutionProfile.
    pub fn to_builder(&self) -> ExecutionProfileBuilder {
        self.0.to_builder()
    }

    /// Returns a new handle to this ExecutionProfile.
    pub fn into_handle(self) -> ExecutionProfileHandle {
        ExecutionProfileHandle(Arc::new((ArcSwap::new(self.0), None)))
    }

    /// Returns a new handle to this ExecutionProfile, tagging the handle with provided label.
    /// The tag, as its name suggests, is only useful for debugging purposes, while being confused
    /// about which statement is assigned which handle.
    pub fn into_handle_with_label(self, label: String) -> ExecutionProfileHandle {
        ExecutionProfileHandle(Arc::new((ArcSwap::new(self.0), Some(label))))
    }

    /// Gets the page size associated with this profile.
    pub fn get_page_size(&self) -> PageSize {
        self.0.page_size
    }

    /// Gets client timeout associated with this profile.
    pub fn get_request_timeout(&self) -> Option<Duration> {
        self.0.request_timeout
    }
}

/// A handle that points to an ExecutionProfile.
///
/// Its goal is to enable remapping all associated statements
/// to another execution profile at once.
/// Note: Cloned handles initially point to the same Arc'ed execution profile.
/// However, as the mapping has yet another level of indirection - through
/// `Arc<ArcSwap>` - remapping one of them affects all the others, as under the hood
/// it is done by replacing the Arc held by the ArcSwap, which is shared
/// by all cloned handles.
/// The optional String is just for debug purposes. Its purpose is described
/// in [ExecutionProfile::into_handle_with_label].
#[derive(Debug, Clone)]
pub struct ExecutionProfileHandle(Arc<(ArcSwap<ExecutionProfileInner>, Option<String>)>);

impl ExecutionProfileHandle {
    pub(crate) fn access(&self) -> Arc<ExecutionProfileInner> {
        self.0 .0.load_full()
    }

    /// Creates a builder having all options set to the same as set in the ExecutionProfile pointed by this handle.
    pub fn pointee_to_builder(&self) -> ExecutionProfileBuilder {
        self.0 .0.load().to_builder()
    }

    /// Returns execution profile pointed by this handle.
    pub fn to_profile(&self) -> ExecutionProfile {
        ExecutionProfile(self.access())
    }

    /// Returns the label this handle was tagged with, if any.
    pub fn label(&self) -> Option<&str> {
        self.0 .1.as_deref()
    }

    /// Makes the handle point to a new execution profile.
    /// All statements holding this handle will reflect the change.
    pub fn map_to_another_profile(&mut self, profile: ExecutionProfile) {
        self.0 .0.store(profile.0)
    }
}
