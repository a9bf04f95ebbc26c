use bitflags::bitflags;

bitflags! {
    /// Execution-loop behavior toggles. Both default off: const-assignment
    /// and null-context member access are hard errors unless loosened here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExecutionFlags: u32 {
        const IGNORE_CONST_SPECIFIER    = 1 << 0;
        const ALLOW_NULL_INSTANCE_ACCESS = 1 << 1;
    }
}
