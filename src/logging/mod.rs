pub mod logging_util;
