pub mod index_stats;
