use string_cache::DefaultAtom;

/// One parsed source file: the module header and its body items.
#[derive(PartialEq, Eq, Debug)]
pub struct SourceUnit {
    pub name: DefaultAtom,
    pub items: Vec<Item>,
}

/// A net reference inside a port connection: a named net or a constant bit.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum NetRef {
    Net(DefaultAtom),
    Const(bool),
}

/// A named port connection `.Port(net)` of a primitive instance.
#[derive(PartialEq, Eq, Debug)]
pub struct Connection {
    pub port: DefaultAtom,
    pub net: Option<NetRef>,
}

#[derive(PartialEq, Eq, Debug)]
pub enum Item {
    Input(Option<(u32, u32)>, Vec<DefaultAtom>),
    Output(Option<(u32, u32)>, Vec<DefaultAtom>),
    /// Accepted syntax; wire declarations confer no driving.
    Wire,
    Assign {
        lhs: DefaultAtom,
        rhs: Expr,
    },
    Instance {
        module: DefaultAtom,
        name: DefaultAtom,
        connections: Vec<Connection>,
    },
}

/// Boolean expression over nets, as written on the RHS of an assignment.
#[derive(PartialEq, Eq, Debug)]
pub enum Expr {
    Ident(DefaultAtom),
    Const(bool),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
    Cond {
        sel: Box<Expr>,
        on_true: Box<Expr>,
        on_false: Box<Expr>,
    },
}
