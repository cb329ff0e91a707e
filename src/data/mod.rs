/// Data layer: core types, loading, export and viewer selection.
///
/// Architecture:
/// ```text
///  *.dat / transitions / *.csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse files → TrajectoryTable / TransitionTable / GenericTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────┐
///   │ model            │  typed rows, transition classes
///   └──────────────────┘
///        │                         │
///        ▼                         ▼
///   ┌──────────┐             ┌──────────┐
///   │  export  │ CSV/Parquet │  filter  │  viewer selections → visible frames
///   └──────────┘             └──────────┘
/// ```

pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;

pub use error::LoadError;
