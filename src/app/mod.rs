// ==========================================
// 八字排盘引擎 - 应用层
// ==========================================
// 职责: 进程级装配, 供命令行与宿主程序使用
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState};
