//! Tripperware: composable request/response interceptors wrapped around a transport.
//!
//! Every unit of a chain implements [`RoundTrip`]. A [`Tripper`] additionally owns the next unit,
//! bound once through [`Tripper::wrap`]. Chains are built innermost first:
//!
//! ```text
//! chain = transport
//! for tripper in innermost..=outermost { tripper.wrap(chain); chain = tripper }
//! ```
//!
//! Requests are mutated outermost-first on the way in; responses are observed in the reverse
//! order on the way out.

pub mod basic;
pub mod log;
pub mod oauth2;
pub mod status;

pub use basic::BasicTripper;
pub use log::LogTripper;
pub use oauth2::{
	OAuth2Identity, OAuth2Tripper, RejectionPolicy, TokenCache, TokenLookup, TokenMetrics,
};
pub use status::StatusTripper;

// self
use crate::{
	_prelude::*,
	error::ChainError,
	message::{Request, Response},
};

/// Boxed future returned by [`RoundTrip::round_trip`].
pub type TripFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + 'a + Send>>;

/// A unit able to turn a request into exactly one response or error.
///
/// Transports implement this directly; trippers implement it by delegating to the unit they wrap.
/// A transport must never signal a network failure through a status code.
pub trait RoundTrip
where
	Self: Send + Sync,
{
	/// Processes `request`, returning the response or the failure.
	fn round_trip(&self, request: Request) -> TripFuture<'_>;
}
impl<T> RoundTrip for Arc<T>
where
	T: ?Sized + RoundTrip,
{
	fn round_trip(&self, request: Request) -> TripFuture<'_> {
		<T as RoundTrip>::round_trip(&**self, request)
	}
}
impl<T> RoundTrip for Box<T>
where
	T: ?Sized + RoundTrip,
{
	fn round_trip(&self, request: Request) -> TripFuture<'_> {
		<T as RoundTrip>::round_trip(&**self, request)
	}
}

/// A [`RoundTrip`] that wraps another one.
pub trait Tripper
where
	Self: RoundTrip,
{
	/// Binds the successor. Called once while the chain is being built.
	fn wrap(&mut self, next: Box<dyn RoundTrip>);
}

/// Successor slot held by every tripper.
pub(crate) struct Next {
	tripper: &'static str,
	inner: Option<Box<dyn RoundTrip>>,
}
impl Next {
	pub(crate) const fn unwrapped(tripper: &'static str) -> Self {
		Self { tripper, inner: None }
	}

	pub(crate) fn set(&mut self, next: Box<dyn RoundTrip>) {
		self.inner = Some(next);
	}

	/// Returns the successor or a [`ChainError`] when the tripper was never wrapped.
	pub(crate) fn get(&self) -> Result<&dyn RoundTrip> {
		self.inner
			.as_deref()
			.ok_or_else(|| ChainError::Unwrapped { tripper: self.tripper }.into())
	}
}
impl Debug for Next {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Next")
			.field("tripper", &self.tripper)
			.field("wrapped", &self.inner.is_some())
			.finish()
	}
}

/// An assembled chain; its entry point is the outermost unit.
pub struct Chain {
	head: Box<dyn RoundTrip>,
	trippers: Vec<&'static str>,
}
impl Chain {
	/// Starts a chain at `transport`.
	pub fn new(transport: impl 'static + RoundTrip) -> Self {
		Self { head: Box::new(transport), trippers: Vec::new() }
	}

	/// Builds a chain from `trippers`, given innermost first.
	pub fn build(
		transport: impl 'static + RoundTrip,
		trippers: impl IntoIterator<Item = (&'static str, Box<dyn Tripper>)>,
	) -> Self {
		let mut chain = Self::new(transport);

		for (name, mut tripper) in trippers {
			tripper.wrap(chain.head);

			chain.head = Box::new(tripper);
			chain.trippers.push(name);
		}

		chain
	}

	/// Wraps the current head with `tripper`, making it the new outermost unit.
	pub fn with<T>(mut self, mut tripper: T) -> Self
	where
		T: 'static + Tripper,
	{
		tripper.wrap(self.head);

		self.head = Box::new(tripper);
		self.trippers.push(std::any::type_name::<T>().rsplit("::").next().unwrap_or("tripper"));

		self
	}

	/// Returns tripper names from innermost to outermost.
	pub fn trippers(&self) -> &[&'static str] {
		&self.trippers
	}
}
impl RoundTrip for Chain {
	fn round_trip(&self, request: Request) -> TripFuture<'_> {
		self.head.round_trip(request)
	}
}
impl Debug for Chain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Chain").field("trippers", &self.trippers).finish()
	}
}
