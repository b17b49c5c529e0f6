use bitfield::bitfield;

bitfield! {
    /// Raw 32-bit instruction word. The three formats share the `op` field and
    /// overlap everywhere else, so every accessor is available on every word;
    /// which ones make sense depends on [`Format`](super::Format).
    #[derive(Default, Clone, Copy, PartialEq, Eq)]
    pub struct Word(u32);
    impl Debug;
    u32;
    pub op, set_op: 5, 0;
    pub a, set_a: 31, 27;
    pub b, set_b: 26, 22;
    pub c, set_c: 21, 17;
    pub opx, set_opx: 16, 11;
    pub imm5, set_imm5: 10, 6;
    pub imm16, set_imm16: 21, 6;
    pub imm26, set_imm26: 31, 6;
}

impl Word {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Catalog lookup key: the primary opcode, extended by `opx` for R-format words
    #[inline]
    pub fn key(self) -> u32 {
        if self.op() == super::OPCODE_R {
            self.op() | (self.opx() << 6)
        } else {
            self.op()
        }
    }
}
