// [apps/control-plane/src/lib.rs]
/*!
 * Biblioteca del plano de control: expuesta para que `tests/mirror/**`
 * pueda construir el `Router` completo contra una base `:memory:` sin
 * pasar por el binario (spec §6 completo).
 */

pub mod errors;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod state;

pub use state::AppState;
