pub(crate) mod arc_key;
pub(crate) mod str_escapes;
