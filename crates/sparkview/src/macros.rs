// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Declarative construction of chunk trees.

/// Builds a `Vec<Chunk>`.
///
/// Each entry names a [`Chunk`](crate::chunk::Chunk) constructor with its
/// arguments. `for_each` takes its body in brackets.
///
/// ```
/// use sparkview::chunks;
///
/// let tree = chunks![
///     literal("<ul>"),
///     for_each("var item in items") [
///         literal("<li>"),
///         expression("item"),
///         literal("</li>"),
///     ],
///     literal("</ul>"),
/// ];
/// assert_eq!(tree.len(), 3);
/// assert_eq!(tree[1].children().len(), 3);
/// ```
#[macro_export]
macro_rules! chunks {
    () => {
        ::std::vec::Vec::<$crate::chunk::Chunk>::new()
    };
    ($($kind:ident ( $($arg:expr),* $(,)? ) $([ $($body:tt)* ])?),+ $(,)?) => {
        ::std::vec![$($crate::__chunk!($kind ( $($arg),* ) $([ $($body)* ])?)),+]
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __chunk {
    (for_each ( $code:expr ) [ $($body:tt)* ]) => {
        $crate::chunk::Chunk::for_each($code, $crate::chunks![$($body)*])
    };
    ($kind:ident ( $($arg:expr),* )) => {
        $crate::chunk::Chunk::$kind($($arg),*)
    };
}
