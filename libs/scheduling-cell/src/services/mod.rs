pub mod allocator;
pub mod availability;
pub mod scheduling;
pub mod sweeper;
pub mod treatment;
pub mod window;

pub use allocator::SlotAllocator;
pub use availability::AvailabilityService;
pub use scheduling::SchedulingService;
pub use sweeper::LifecycleSweeper;
pub use treatment::TreatmentService;
pub use window::AvailabilityWindowService;
