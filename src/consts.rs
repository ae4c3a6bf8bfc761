// Well-known library types the lowering depends on
pub const OBJECT: &str = "java.lang.Object";
pub const STRING: &str = "java.lang.String";
pub const CLASS: &str = "java.lang.Class";
pub const THROWABLE: &str = "java.lang.Throwable";
pub const ITERATOR: &str = "java.util.Iterator";
pub const LIST: &str = "java.util.List";
pub const ARRAY_LIST: &str = "java.util.ArrayList";
pub const METHOD_HANDLE: &str = "java.lang.invoke.MethodHandle";
pub const LAMBDA_METAFACTORY: &str = "java.lang.invoke.LambdaMetafactory";

// Packages visible by simple name in every unit, searched after explicit
// and same-package imports
pub const IMPLICIT_IMPORTS: &[&str] = &["java.lang", "java.util"];

// Mode bits of the runtime `compare(int, int)` helper
pub const COMPARE_GT: i32 = 1;
pub const COMPARE_EQ: i32 = 2;
pub const COMPARE_LT: i32 = 4;

// Dynamic call sites for static calls carry this prefix before the method name
pub const STATIC_CALL_PREFIX: &str = "static$";

// Prefix of compiler temporaries in a scope; never a legal identifier
pub const TEMP_PREFIX: &str = "*";

// Name under which a captured self reference is bound in synthesized methods
pub const SELF_BINDING: &str = "this";

// Fields of synthesized closure types
pub const CLOSURE_HANDLE_FIELD: &str = "methodHandle";
pub const CLOSURE_SELF_FIELD: &str = "self";
pub const CLOSURE_LOCALS_FIELD: &str = "local";
