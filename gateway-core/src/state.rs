/// Trait alias for types that can serve as the gateway's Axum router state.
/// Blanket-implemented for anything `Clone + Send + Sync + 'static` — the
/// `Services` struct in the `gateway` binary crate satisfies it directly.
pub trait GatewayState: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> GatewayState for T {}
