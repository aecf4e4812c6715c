pub use enclose::*;

#[macro_export]
macro_rules! reaction {
    ($runtime:expr, ( $($d_tt:tt)* ) $ctx:ident => $($b:tt)*) => {
        $crate::Reaction::new(&$runtime, $crate::macros::enclose!(($( $d_tt )*) Box::new(move |$ctx: &$crate::Evaluation| { $($b)* })))
    };
    ($runtime:expr, $ctx:ident => $($b:tt)*) => {
        $crate::Reaction::new(&$runtime, Box::new(move |$ctx: &$crate::Evaluation| { $($b)* }))
    };
}

#[macro_export]
macro_rules! autorun {
    ($runtime:expr, ( $($d_tt:tt)* ) $ctx:ident => $($b:tt)*) => {{
        let reaction = $crate::reaction!($runtime, ( $($d_tt)* ) $ctx => $($b)*);
        reaction.update();
        reaction
    }};
    ($runtime:expr, $ctx:ident => $($b:tt)*) => {{
        let reaction = $crate::reaction!($runtime, $ctx => $($b)*);
        reaction.update();
        reaction
    }};
}
