pub mod buckets;
pub mod kpi;
pub mod period;
pub mod reconcile;
pub mod report;
