/// Lifecycle of a tracked identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly created, waiting for enough matches to be reported
    #[default]
    Tentative,
    /// Corroborated identity, exposed to compliance and reports
    Confirmed,
    /// Aged out; removed from the table and never reported again
    Deleted,
}
