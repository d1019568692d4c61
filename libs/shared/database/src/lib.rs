pub mod supabase;
pub mod timeout;

pub use supabase::SupabaseClient;
pub use timeout::with_write_timeout;
