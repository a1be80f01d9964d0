pub mod connectivity;
pub mod db;
pub mod memory;

pub use connectivity::ConnectivityMonitor;
pub use db::PgProgressRepository;
pub use memory::MemoryProgressRepository;
