// token错误
// 12xxx
pub const INVALID_TOKEN: u32 = 12001;
pub const TOKEN_EXPIRED: u32 = 12002;
pub const MISSING_TOKEN: u32 = 12003;

// 存储错误
// 13xxx
pub const SOMETHING_WENT_WRONG: u32 = 13001;
pub const STORAGE_CONFLICT: u32 = 13002;

// 游戏逻辑错误
// 14xxx
pub const INVALID_INPUT: u32 = 14001;
pub const RATE_LIMITED: u32 = 14002;
pub const NOT_FOUND: u32 = 14003;

// request错误
// 20xxx
pub const VALIDATION_ERROR: u32 = 20001;
pub const JSON_REJECTION: u32 = 20002;
pub const SIGNATURE_ERROR: u32 = 20003;
