//! Builtin atom seed table
//!
//! The order of this table fixes the numeric id of every builtin atom and
//! must match the reference VM build the bytecode is loaded into. Id 0 is
//! the null atom and is not part of the table.

use super::AtomKind;

macro_rules! builtin_atoms {
    ($( $ident:ident = $name:literal $(: $kind:ident)?; )*) => {
        /// Names and kinds of the builtin atoms, in id order starting at 1
        pub(crate) const BUILTIN_ATOMS: &[(&str, AtomKind)] = &[
            $( ($name, builtin_atoms!(@kind $($kind)?)), )*
        ];

        #[allow(non_camel_case_types, dead_code, clippy::upper_case_acronyms)]
        #[repr(u32)]
        enum Id {
            Null = 0,
            $( $ident, )*
        }

        /// Well-known atom ids
        pub mod atoms {
            use crate::atom::Atom;
            $(
                #[allow(non_upper_case_globals, missing_docs)]
                pub const $ident: Atom = Atom(super::Id::$ident as u32);
            )*
        }
    };
    (@kind) => { AtomKind::String };
    (@kind $kind:ident) => { AtomKind::$kind };
}

builtin_atoms! {
    null = "null";
    false_ = "false";
    true_ = "true";
    if_ = "if";
    else_ = "else";
    return_ = "return";
    var = "var";
    this = "this";
    delete = "delete";
    void = "void";
    typeof_ = "typeof";
    new = "new";
    in_ = "in";
    instanceof = "instanceof";
    do_ = "do";
    while_ = "while";
    for_ = "for";
    break_ = "break";
    continue_ = "continue";
    switch = "switch";
    case = "case";
    default = "default";
    throw = "throw";
    try_ = "try";
    catch = "catch";
    finally = "finally";
    function = "function";
    debugger = "debugger";
    with = "with";
    class = "class";
    const_ = "const";
    enum_ = "enum";
    export = "export";
    extends = "extends";
    import = "import";
    super_ = "super";
    implements = "implements";
    interface = "interface";
    let_ = "let";
    package = "package";
    private = "private";
    protected = "protected";
    public = "public";
    static_ = "static";
    yield_ = "yield";
    await_ = "await";
    empty_string = "";
    length = "length";
    fileName = "fileName";
    lineNumber = "lineNumber";
    message = "message";
    errors = "errors";
    stack = "stack";
    name = "name";
    toString = "toString";
    toLocaleString = "toLocaleString";
    valueOf = "valueOf";
    eval = "eval";
    prototype = "prototype";
    constructor = "constructor";
    configurable = "configurable";
    writable = "writable";
    enumerable = "enumerable";
    value = "value";
    get = "get";
    set = "set";
    of = "of";
    __proto__ = "__proto__";
    undefined = "undefined";
    number = "number";
    boolean = "boolean";
    string = "string";
    object = "object";
    symbol = "symbol";
    integer = "integer";
    unknown = "unknown";
    arguments = "arguments";
    callee = "callee";
    caller = "caller";
    _eval_ = "<eval>";
    _ret_ = "<ret>";
    _var_ = "<var>";
    _arg_var_ = "<arg_var>";
    _with_ = "<with>";
    lastIndex = "lastIndex";
    target = "target";
    index = "index";
    input = "input";
    defineProperties = "defineProperties";
    apply = "apply";
    join = "join";
    concat = "concat";
    split = "split";
    construct = "construct";
    getPrototypeOf = "getPrototypeOf";
    setPrototypeOf = "setPrototypeOf";
    isExtensible = "isExtensible";
    preventExtensions = "preventExtensions";
    has = "has";
    deleteProperty = "deleteProperty";
    defineProperty = "defineProperty";
    getOwnPropertyDescriptor = "getOwnPropertyDescriptor";
    ownKeys = "ownKeys";
    add = "add";
    done = "done";
    next = "next";
    values = "values";
    source = "source";
    flags = "flags";
    global = "global";
    unicode = "unicode";
    raw = "raw";
    new_target = "new.target";
    this_active_func = "this.active_func";
    home_object = "<home_object>";
    computed_field = "<computed_field>";
    static_computed_field = "<static_computed_field>";
    class_fields_init = "<class_fields_init>";
    brand = "<brand>";
    hash_constructor = "#constructor";
    as_ = "as";
    from = "from";
    meta = "meta";
    _default_ = "*default*";
    _star_ = "*";
    Module = "Module";
    then = "then";
    resolve = "resolve";
    reject = "reject";
    promise = "promise";
    proxy = "proxy";
    revoke = "revoke";
    async_ = "async";
    exec = "exec";
    groups = "groups";
    status = "status";
    reason = "reason";
    globalThis = "globalThis";
    toJSON = "toJSON";
    Object = "Object";
    Array = "Array";
    Error = "Error";
    Number = "Number";
    String = "String";
    Boolean = "Boolean";
    Symbol = "Symbol";
    Arguments = "Arguments";
    Math = "Math";
    JSON = "JSON";
    Date = "Date";
    Function = "Function";
    GeneratorFunction = "GeneratorFunction";
    ForInIterator = "ForInIterator";
    RegExp = "RegExp";
    ArrayBuffer = "ArrayBuffer";
    SharedArrayBuffer = "SharedArrayBuffer";
    Uint8ClampedArray = "Uint8ClampedArray";
    Int8Array = "Int8Array";
    Uint8Array = "Uint8Array";
    Int16Array = "Int16Array";
    Uint16Array = "Uint16Array";
    Int32Array = "Int32Array";
    Uint32Array = "Uint32Array";
    BigInt64Array = "BigInt64Array";
    BigUint64Array = "BigUint64Array";
    Float32Array = "Float32Array";
    Float64Array = "Float64Array";
    DataView = "DataView";
    BigInt = "BigInt";
    Map = "Map";
    Set = "Set";
    WeakMap = "WeakMap";
    WeakSet = "WeakSet";
    Map_Iterator = "Map Iterator";
    Set_Iterator = "Set Iterator";
    Array_Iterator = "Array Iterator";
    String_Iterator = "String Iterator";
    RegExp_String_Iterator = "RegExp String Iterator";
    Generator = "Generator";
    Proxy = "Proxy";
    Promise = "Promise";
    PromiseResolveFunction = "PromiseResolveFunction";
    PromiseRejectFunction = "PromiseRejectFunction";
    AsyncFunction = "AsyncFunction";
    AsyncFunctionResolve = "AsyncFunctionResolve";
    AsyncFunctionReject = "AsyncFunctionReject";
    AsyncGeneratorFunction = "AsyncGeneratorFunction";
    AsyncGenerator = "AsyncGenerator";
    EvalError = "EvalError";
    RangeError = "RangeError";
    ReferenceError = "ReferenceError";
    SyntaxError = "SyntaxError";
    TypeError = "TypeError";
    URIError = "URIError";
    InternalError = "InternalError";
    Private_brand = "<brand>": Private;
    Symbol_toPrimitive = "Symbol.toPrimitive": Symbol;
    Symbol_iterator = "Symbol.iterator": Symbol;
    Symbol_match = "Symbol.match": Symbol;
    Symbol_matchAll = "Symbol.matchAll": Symbol;
    Symbol_replace = "Symbol.replace": Symbol;
    Symbol_search = "Symbol.search": Symbol;
    Symbol_split = "Symbol.split": Symbol;
    Symbol_toStringTag = "Symbol.toStringTag": Symbol;
    Symbol_isConcatSpreadable = "Symbol.isConcatSpreadable": Symbol;
    Symbol_hasInstance = "Symbol.hasInstance": Symbol;
    Symbol_species = "Symbol.species": Symbol;
    Symbol_unscopables = "Symbol.unscopables": Symbol;
    Symbol_asyncIterator = "Symbol.asyncIterator": Symbol;
}

/// One past the last builtin atom id
pub const ATOM_END: u32 = BUILTIN_ATOMS.len() as u32 + 1;
