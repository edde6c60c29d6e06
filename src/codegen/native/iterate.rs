//! Level walker behind the native iteration entry point
//!
//! The walker is a depth-first traversal of the storage levels that can stop
//! after any record and resume later. Its whole state lives in the context
//! blob:
//!
//! ```text
//! word 0            blob size (ctx protocol)
//! word 1            current depth
//! word 2            done flag
//! words 3..3+n      position per level
//! words 3+n..3+2n   segment end per level
//! ```

use std::ffi::c_void;

use crate::codegen::ctx;
use crate::dtype::Element;
use crate::format::ModeFormat;
use crate::storage::RawStorage;

const DEPTH: usize = 1;
const DONE: usize = 2;
const HEADER_WORDS: usize = 3;

/// Position range of `level` below parent position `parent`
///
/// # Safety
/// `storage` must describe live storage and `level < order`.
#[inline]
unsafe fn segment(storage: &RawStorage, level: usize, parent: usize) -> (usize, usize) {
    unsafe {
        if storage.mode_type(level) == ModeFormat::Dense.tag() {
            let size = *storage.index0(level) as usize;
            (parent * size, (parent + 1) * size)
        } else {
            let pos = storage.index0(level);
            (*pos.add(parent) as usize, *pos.add(parent + 1) as usize)
        }
    }
}

/// Coordinate stored at position `q` of `level`
///
/// # Safety
/// Same as [`segment`], and `q` must lie inside a segment of `level`.
#[inline]
unsafe fn coordinate(storage: &RawStorage, level: usize, q: usize) -> i32 {
    unsafe {
        if storage.mode_type(level) == ModeFormat::Dense.tag() {
            (q % *storage.index0(level) as usize) as i32
        } else {
            *storage.index1(level).add(q)
        }
    }
}

/// Allocate a context positioned before the first record
unsafe fn start(storage: &RawStorage) -> *mut c_void {
    let order = storage.order as usize;
    let blob = ctx::alloc((HEADER_WORDS + 2 * order) * std::mem::size_of::<usize>());
    if order > 0 {
        unsafe {
            let words = blob.cast::<usize>();
            let (begin, end) = segment(storage, 0, 0);
            *words.add(HEADER_WORDS) = begin;
            *words.add(HEADER_WORDS + order) = end;
        }
    }
    blob
}

/// Native iteration entry point for components of type `T`
///
/// # Safety
/// `args` must follow the iteration ABI: a context slot, coordinate and value
/// buffers of at least `capacity` records, the capacity, and a live storage
/// handle whose components are `T`.
pub(crate) unsafe extern "C" fn iterate<T: Element>(args: *mut *mut c_void) -> i32 {
    unsafe {
        let ctx_slot = (*args).cast::<*mut c_void>();
        let coords = (*args.add(1)).cast::<i32>();
        let vals = (*args.add(2)).cast::<T>();
        let capacity = *(*args.add(3)).cast::<i32>();
        let storage = &*(*args.add(4)).cast::<RawStorage>();
        if capacity <= 0 {
            return 0;
        }

        if (*ctx_slot).is_null() {
            *ctx_slot = start(storage);
        }
        let order = storage.order as usize;
        let words =
            std::slice::from_raw_parts_mut((*ctx_slot).cast::<usize>(), HEADER_WORDS + 2 * order);
        walk(storage, words, coords, vals, capacity as usize) as i32
    }
}

unsafe fn walk<T: Element>(
    storage: &RawStorage,
    words: &mut [usize],
    coords: *mut i32,
    vals: *mut T,
    capacity: usize,
) -> usize {
    let order = storage.order as usize;
    let (header, levels) = words.split_at_mut(HEADER_WORDS);
    if header[DONE] != 0 {
        return 0;
    }
    let stored = storage.vals.cast::<T>();

    if order == 0 {
        header[DONE] = 1;
        if storage.vals_size > 0 {
            unsafe { vals.write(stored.read()) };
            return 1;
        }
        return 0;
    }

    let (pos, end) = levels.split_at_mut(order);
    let mut depth = header[DEPTH];
    let mut count = 0;
    while count < capacity {
        if pos[depth] < end[depth] {
            if depth + 1 == order {
                unsafe {
                    let record = coords.add(count * order);
                    for (level, &q) in pos.iter().enumerate() {
                        *record.add(storage.mode_of_level(level)) = coordinate(storage, level, q);
                    }
                    vals.add(count).write(stored.add(pos[depth]).read());
                }
                pos[depth] += 1;
                count += 1;
            } else {
                let (begin, stop) = unsafe { segment(storage, depth + 1, pos[depth]) };
                depth += 1;
                pos[depth] = begin;
                end[depth] = stop;
            }
        } else if depth == 0 {
            header[DONE] = 1;
            break;
        } else {
            depth -= 1;
            pos[depth] += 1;
        }
    }
    header[DEPTH] = depth;
    count
}
