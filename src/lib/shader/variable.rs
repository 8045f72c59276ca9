//! Variables flowing through the node graph and the arena holding them.

use super::parsing::split_reference;

use std::{
    fmt::{self, Display},
    ops::{Index, IndexMut},
};

/// Type every global is declared with.
pub const GLOBAL_TYPE: &str = "vec4";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// Where the value of a variable comes from.
pub enum Namespace {
    /// Per-stage output shared by every node of the stage (`Global.<name>`).
    Global,
    /// Vertex attribute (`Attr.<name>`).
    Attribute,
    /// Material parameter uniform (`MatParam.<name>`).
    MaterialParameter,
    /// Engine-supplied uniform (`WorldParam.<name>`).
    WorldParameter,
    /// Input or output of the named shader node.
    Node(String),
}

impl Namespace {
    /// Classify a namespace token. Anything that is not a reserved word names a node.
    pub fn parse(token: &str) -> Self {
        match token {
            "Global" => Self::Global,
            "Attr" => Self::Attribute,
            "MatParam" => Self::MaterialParameter,
            "WorldParam" => Self::WorldParameter,
            node => Self::Node(node.to_owned()),
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Global => write!(f, "Global"),
            Namespace::Attribute => write!(f, "Attr"),
            Namespace::MaterialParameter => write!(f, "MatParam"),
            Namespace::WorldParameter => write!(f, "WorldParam"),
            Namespace::Node(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// A declared or resolved GLSL variable.
pub struct ShaderNodeVariable {
    /// GLSL type, possibly a `|`-separated union of sampler kinds before resolution.
    pub r#type: String,
    /// Variable name as it will be declared.
    pub name: String,
    /// Origin, `None` for definition signatures.
    pub namespace: Option<Namespace>,
    /// Array length: an integer literal or an uppercased define name.
    pub multiplicity: Option<String>,
    /// Default value given in the definition.
    pub default_value: Option<String>,
    /// Declared as a stage output (global or varying).
    pub is_shader_output: bool,
    /// Normalized activation condition.
    pub condition: Option<String>,
    /// Define sizing this array, when the multiplicity comes from a material parameter.
    pub multiplicity_define: Option<String>,
}

impl ShaderNodeVariable {
    /// Create a variable from its type and name.
    pub fn new(r#type: &str, name: &str) -> Self {
        Self {
            r#type: r#type.to_owned(),
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Set the namespace.
    pub fn in_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Set the multiplicity.
    pub fn with_multiplicity(mut self, multiplicity: Option<String>) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// Sampler variables may only be mapping inputs.
    pub fn is_sampler(&self) -> bool {
        self.r#type.starts_with("sampler")
    }

    /// `true` when the namespace and name designate the same variable.
    pub fn same_as(&self, other: &ShaderNodeVariable) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }

    /// Type with swizzle suffix, used in diagnostics.
    pub fn describe(&self, swizzle: &str) -> String {
        if swizzle.is_empty() {
            self.r#type.clone()
        } else {
            format!("{}.{swizzle}", self.r#type)
        }
    }

    /// Type with array suffix, used in diagnostics.
    pub fn describe_array(&self) -> String {
        format!(
            "{}[{}]",
            self.r#type,
            self.multiplicity.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A `[namespace.]name[.swizzle]` token as written in a mapping.
pub struct VariableRef {
    /// Namespace, when the mapping side carries one.
    pub namespace: Option<Namespace>,
    /// Variable name.
    pub name: String,
    /// Component selection, empty for the full vector.
    pub swizzle: String,
}

impl VariableRef {
    /// Parse one side of a mapping. `namespaced` tells whether the first part is a namespace.
    ///
    /// Returns `None` when the token count does not fit.
    pub fn parse(text: &str, namespaced: bool) -> Option<Self> {
        let parts = split_reference(text)?;

        match (namespaced, parts.as_slice()) {
            (true, [namespace, name]) => Some(Self::new(Some(*namespace), name, "")),
            (true, [namespace, name, swizzle]) => Some(Self::new(Some(*namespace), name, swizzle)),
            (false, [name]) => Some(Self::new(None, name, "")),
            (false, [name, swizzle]) => Some(Self::new(None, name, swizzle)),
            _ => None,
        }
    }

    fn new(namespace: Option<&str>, name: &str, swizzle: &str) -> Self {
        Self {
            namespace: namespace.map(Namespace::parse),
            name: name.to_owned(),
            swizzle: swizzle.to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Stable handle to a variable stored in [Variables].
pub struct VarId(usize);

#[derive(Clone, Debug, Default, PartialEq)]
/// Arena of every variable referenced by a technique. Two mappings sharing a [VarId] share the
/// declaration.
pub struct Variables(Vec<ShaderNodeVariable>);

impl Variables {
    /// Store a variable and get its handle.
    pub fn add(&mut self, var: ShaderNodeVariable) -> VarId {
        self.0.push(var);
        VarId(self.0.len() - 1)
    }

    /// Number of stored variables.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over handles and variables.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &ShaderNodeVariable)> {
        self.0.iter().enumerate().map(|(i, var)| (VarId(i), var))
    }
}

impl Index<VarId> for Variables {
    type Output = ShaderNodeVariable;

    fn index(&self, id: VarId) -> &Self::Output {
        &self.0[id.0]
    }
}

impl IndexMut<VarId> for Variables {
    fn index_mut(&mut self, id: VarId) -> &mut Self::Output {
        &mut self.0[id.0]
    }
}

/// Natural component count of a swizzlable type, `None` for matrices, samplers and structs.
pub fn component_count(r#type: &str) -> Option<usize> {
    match r#type {
        "float" | "int" | "uint" | "bool" => Some(1),
        _ => {
            let size = r#type
                .strip_prefix("vec")
                .or_else(|| r#type.strip_prefix("ivec"))
                .or_else(|| r#type.strip_prefix("uvec"))
                .or_else(|| r#type.strip_prefix("bvec"))?;

            match size {
                "2" => Some(2),
                "3" => Some(3),
                "4" => Some(4),
                _ => None,
            }
        }
    }
}

/// Component count once a swizzle is applied, `None` if the type cannot be swizzled.
pub fn cardinality(r#type: &str, swizzle: &str) -> Option<usize> {
    let count = component_count(r#type)?;

    if swizzle.is_empty() {
        Some(count)
    } else {
        Some(swizzle.len())
    }
}

/// Smallest float type holding `count` components.
pub fn float_type(count: usize) -> String {
    if count == 1 {
        "float".to_owned()
    } else {
        format!("vec{count}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn namespaces() {
        assert_eq!(Namespace::parse("Global"), Namespace::Global);
        assert_eq!(Namespace::parse("Attr"), Namespace::Attribute);
        assert_eq!(Namespace::parse("MatParam"), Namespace::MaterialParameter);
        assert_eq!(Namespace::parse("WorldParam"), Namespace::WorldParameter);
        assert_eq!(
            Namespace::parse("CommonVert"),
            Namespace::Node("CommonVert".to_owned())
        );
        assert_eq!(Namespace::MaterialParameter.to_string(), "MatParam");
    }

    #[test]
    fn references() {
        let right = VariableRef::parse("MatParam.Color.xyz", true).unwrap();
        assert_eq!(right.namespace, Some(Namespace::MaterialParameter));
        assert_eq!(right.name, "Color");
        assert_eq!(right.swizzle, "xyz");

        let left = VariableRef::parse("texCoord", false).unwrap();
        assert_eq!(left.namespace, None);
        assert_eq!(left.swizzle, "");

        assert!(VariableRef::parse("Color", true).is_none());
        assert!(VariableRef::parse("a.b.c", false).is_none());
        assert!(VariableRef::parse("A.b.c.d", true).is_none());
    }

    #[test]
    fn cardinalities() {
        assert_eq!(cardinality("vec4", ""), Some(4));
        assert_eq!(cardinality("vec4", "xy"), Some(2));
        assert_eq!(cardinality("float", ""), Some(1));
        assert_eq!(cardinality("ivec3", ""), Some(3));
        assert_eq!(cardinality("mat4", ""), None);
        assert_eq!(cardinality("sampler2D", ""), None);
        assert_eq!(cardinality("vec5", ""), None);
    }

    #[test]
    fn arena_handles_are_stable() {
        let mut vars = Variables::default();
        let a = vars.add(ShaderNodeVariable::new("vec4", "a"));
        let b = vars.add(ShaderNodeVariable::new("float", "b"));

        vars[a].condition = Some("defined(A)".to_owned());

        assert_ne!(a, b);
        assert_eq!(vars[a].condition.as_deref(), Some("defined(A)"));
        assert_eq!(vars[b].name, "b");
        assert_eq!(vars.len(), 2);
    }
}
