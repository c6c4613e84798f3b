#![allow(unused_macros)]

/// Helper macro for building an out-of-bounds error for a stream position
///
/// ```rust, ignore
///  if pos > self.len() {
///      return Err(out_of_bounds_error!(pos, self.len()));
///  }
/// ```
macro_rules! out_of_bounds_error {
    ($position:expr, $len:expr) => {
        crate::Error::OutOfBounds {
            position: $position,
            len: $len,
        }
    };
}

/// Helper macro for building a dangling branch target error
///
/// ```rust, ignore
///  return Err(dangling_error!(self.name(), label, "target {} was removed", id));
/// ```
macro_rules! dangling_error {
    ($method:expr, $label:expr, $msg:expr) => {
        crate::Error::DanglingBranchTarget {
            method: $method.to_string(),
            label: $label.to_string(),
            detail: $msg.to_string(),
        }
    };

    ($method:expr, $label:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::DanglingBranchTarget {
            method: $method.to_string(),
            label: $label.to_string(),
            detail: format!($fmt, $($arg)*),
        }
    };
}

/// Helper macro for borrowing the stream behind an editor for reading
///
/// ```rust, ignore
///  let len = read_stream!(self.editor).len();
/// ```
macro_rules! read_stream {
    ($editor:expr) => {
        $editor.stream.borrow()
    };
}

/// Helper macro for borrowing the stream behind an editor for writing
///
/// ```rust, ignore
///  let id = write_stream!(self.editor).insert_before(pos, instr)?;
/// ```
macro_rules! write_stream {
    ($editor:expr) => {
        $editor.stream.borrow_mut()
    };
}
