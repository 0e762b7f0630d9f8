//! Module-level syntax: header and declarations.

use nom::multi::{many0, separated_list0};
use nom::IResult;

use crate::parser::function::pfunc;
use crate::parser::primitives::{
    field_name, global_ref, identifier, keyword, quoted_string, sp, token, type_name,
};
use crate::parser::types::ptype;
use crate::parser::{PModule, PType};

enum Item {
    Enum(String, Vec<(String, Vec<PType>)>),
    Struct(String, Vec<(String, PType)>),
    Alias(String, Option<PType>),
    Variable(String, PType),
    Function(crate::parser::PFunc),
}

fn enum_decl(input: &str) -> IResult<&str, Item> {
    let (input, ()) = keyword("enum")(input)?;
    let (input, name) = type_name(input)?;
    let (input, ()) = token("{")(input)?;
    let case = |i| -> IResult<&str, (String, Vec<PType>)> {
        let (i, case_name) = identifier(i)?;
        let (i, ()) = token("(")(i)?;
        let (i, assoc) = separated_list0(token(","), ptype)(i)?;
        let (i, ()) = token(")")(i)?;
        Ok((i, (case_name.to_string(), assoc)))
    };
    let (input, cases) = many0(case)(input)?;
    let (input, ()) = token("}")(input)?;
    Ok((input, Item::Enum(name, cases)))
}

fn struct_decl(input: &str) -> IResult<&str, Item> {
    let (input, ()) = keyword("struct")(input)?;
    let (input, name) = type_name(input)?;
    let (input, ()) = token("{")(input)?;
    let field = |i| -> IResult<&str, (String, PType)> {
        let (i, field) = field_name(i)?;
        let (i, ()) = token(":")(i)?;
        let (i, ty) = ptype(i)?;
        Ok((i, (field, ty)))
    };
    let (input, fields) = many0(field)(input)?;
    let (input, ()) = token("}")(input)?;
    Ok((input, Item::Struct(name, fields)))
}

fn alias_decl(input: &str) -> IResult<&str, Item> {
    let (input, ()) = keyword("alias")(input)?;
    let (input, name) = type_name(input)?;
    let (input, ()) = token("=")(input)?;
    if let Ok((rest, ())) = keyword("opaque")(input) {
        return Ok((rest, Item::Alias(name, None)));
    }
    let (input, ty) = ptype(input)?;
    Ok((input, Item::Alias(name, Some(ty))))
}

fn var_decl(input: &str) -> IResult<&str, Item> {
    let (input, ()) = keyword("var")(input)?;
    let (input, name) = global_ref(input)?;
    let (input, ()) = token(":")(input)?;
    let (input, ty) = ptype(input)?;
    Ok((input, Item::Variable(name, ty)))
}

fn item(input: &str) -> IResult<&str, Item> {
    if let Ok(result) = enum_decl(input) {
        return Ok(result);
    }
    if let Ok(result) = struct_decl(input) {
        return Ok(result);
    }
    if let Ok(result) = alias_decl(input) {
        return Ok(result);
    }
    if let Ok(result) = var_decl(input) {
        return Ok(result);
    }
    let (input, func) = pfunc(input)?;
    Ok((input, Item::Function(func)))
}

/// Parse the loose syntax tree of a whole module.
pub(crate) fn parse_module_syntax(input: &str) -> IResult<&str, PModule> {
    let (input, ()) = keyword("module")(input)?;
    let (input, name) = quoted_string(input)?;
    let (input, ()) = keyword("stage")(input)?;
    let (input, stage) = identifier(input)?;
    let stage = stage.to_string();

    let (input, items) = many0(item)(input)?;
    let (input, ()) = sp(input)?;

    let mut module = PModule {
        name,
        stage,
        enums: Vec::new(),
        structs: Vec::new(),
        aliases: Vec::new(),
        variables: Vec::new(),
        functions: Vec::new(),
    };
    for item in items {
        match item {
            Item::Enum(name, cases) => module.enums.push((name, cases)),
            Item::Struct(name, fields) => module.structs.push((name, fields)),
            Item::Alias(name, ty) => module.aliases.push((name, ty)),
            Item::Variable(name, ty) => module.variables.push((name, ty)),
            Item::Function(func) => module.functions.push(func),
        }
    }
    Ok((input, module))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declarations() {
        let text = r#"module "m"
stage raw

enum $E {
    foo(bool, bool)
    bar()
}

struct $S {
    #flag: bool
}

alias $A = (bool, bool)

alias $O = opaque

var @g: bool
"#;
        let (rest, module) = parse_module_syntax(text).unwrap();
        assert_eq!(rest, "");
        assert_eq!(module.name, "m");
        assert_eq!(module.stage, "raw");
        assert_eq!(module.enums.len(), 1);
        assert_eq!(module.enums[0].1.len(), 2);
        assert_eq!(module.structs.len(), 1);
        assert_eq!(module.aliases.len(), 2);
        assert_eq!(module.aliases[1].1, None);
        assert_eq!(module.variables, vec![("g".to_string(), PType::Bool)]);
    }

    #[test]
    fn test_parse_module_with_function() {
        let text = r#"module "m"
stage raw

func @main: () -> () {
'entry():
    return
}
"#;
        let (rest, module) = parse_module_syntax(text).unwrap();
        assert_eq!(rest, "");
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].name, "main");
    }
}
