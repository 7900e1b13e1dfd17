/// Source of unique, time-ordered asset ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}
